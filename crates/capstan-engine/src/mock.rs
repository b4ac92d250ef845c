//! Mock deployer for testing

use async_trait::async_trait;
use capstan_core::{image_name, AppDefinition, Error, Result};
use capstan_logs::BuildLogWriter;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::deployer::{Deployer, ImageSource};

/// Records every call and can be told to fail or to hold builds in flight
#[derive(Default)]
pub struct MockDeployer {
    prepare_count: AtomicUsize,
    build_count: AtomicUsize,
    apply_count: AtomicUsize,
    remove_count: AtomicUsize,
    reload_count: AtomicUsize,
    /// (app name, image) for every apply
    applied: Mutex<Vec<(String, String)>>,
    fail_prepare: AtomicBool,
    fail_apply: AtomicBool,
    fail_proxy: AtomicBool,
    /// Apps with a running service: apply adds, remove drops
    live: Mutex<HashSet<String>>,
    /// When set, builds wait here until `release` is called
    gate: Option<Arc<Notify>>,
    /// When set, applies wait here until `release_apply` is called
    apply_gate: Option<Arc<Notify>>,
}

impl MockDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds block until `release`
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Default::default()
        }
    }

    /// Applies block until `release_apply`
    pub fn gated_apply() -> Self {
        Self {
            apply_gate: Some(Arc::new(Notify::new())),
            ..Default::default()
        }
    }

    pub fn fail_prepare(self) -> Self {
        self.fail_prepare.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_apply(self) -> Self {
        self.fail_apply.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_proxy(&self, fail: bool) {
        self.fail_proxy.store(fail, Ordering::SeqCst);
    }

    /// Let one held build continue
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Let one held apply continue
    pub fn release_apply(&self) {
        if let Some(gate) = &self.apply_gate {
            gate.notify_one();
        }
    }

    pub fn is_live(&self, app_name: &str) -> bool {
        self.live.lock().contains(app_name)
    }

    pub fn prepare_count(&self) -> usize {
        self.prepare_count.load(Ordering::SeqCst)
    }

    pub fn build_count(&self) -> usize {
        self.build_count.load(Ordering::SeqCst)
    }

    pub fn apply_count(&self) -> usize {
        self.apply_count.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.remove_count.load(Ordering::SeqCst)
    }

    pub fn reload_count(&self) -> usize {
        self.reload_count.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<(String, String)> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn prepare(&self, _app: &AppDefinition, _source: &ImageSource) -> Result<()> {
        self.prepare_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(Error::deployment("Mock prepare failure"));
        }
        Ok(())
    }

    async fn build(
        &self,
        app: &AppDefinition,
        source: &ImageSource,
        log: &BuildLogWriter,
    ) -> Result<String> {
        self.build_count.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let image = source
            .fixed_image(app)
            .unwrap_or_else(|| image_name(&app.app_name, app.next_version()));
        log.line(format!("mock build {}", image));
        Ok(image)
    }

    async fn apply(
        &self,
        app: &AppDefinition,
        image_name: &str,
        log: &BuildLogWriter,
    ) -> Result<()> {
        self.apply_count.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.apply_gate {
            gate.notified().await;
        }
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::deployment("Mock apply failure"));
        }
        self.applied
            .lock()
            .push((app.app_name.clone(), image_name.to_string()));
        self.live.lock().insert(app.app_name.clone());
        log.line(format!("mock apply {}", image_name));
        Ok(())
    }

    async fn remove(&self, app_name: &str) -> Result<()> {
        self.remove_count.fetch_add(1, Ordering::SeqCst);
        self.live.lock().remove(app_name);
        Ok(())
    }

    async fn reload_proxy(&self, _apps: &[AppDefinition]) -> Result<()> {
        self.reload_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_proxy.load(Ordering::SeqCst) {
            return Err(Error::deployment("Mock proxy failure"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_logs::BuildLogRegistry;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let deployer = MockDeployer::new();
        let logs = BuildLogRegistry::new(10);
        let app = AppDefinition::try_new("web", None, false).unwrap();

        deployer.prepare(&app, &ImageSource::Placeholder).await.unwrap();
        let image = deployer
            .build(&app, &ImageSource::Placeholder, &logs.writer("web"))
            .await
            .unwrap();
        deployer.apply(&app, &image, &logs.writer("web")).await.unwrap();

        assert_eq!(deployer.prepare_count(), 1);
        assert_eq!(deployer.build_count(), 1);
        assert_eq!(deployer.applied().len(), 1);
        assert!(deployer.is_live("web"));

        deployer.remove("web").await.unwrap();
        assert!(!deployer.is_live("web"));
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let deployer = MockDeployer::new().fail_prepare();
        let app = AppDefinition::try_new("web", None, false).unwrap();
        assert!(deployer.prepare(&app, &ImageSource::Current).await.is_err());

        deployer.set_fail_proxy(true);
        assert!(deployer.reload_proxy(&[]).await.is_err());
        assert_eq!(deployer.reload_count(), 1);
    }
}
