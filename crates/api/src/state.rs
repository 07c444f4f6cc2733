use std::sync::Arc;

use subtext_annotation::cache::AnnotationCache;
use subtext_annotation::oracle::AnnotationOracle;
use subtext_annotation::scheduler::AnnotationScheduler;
use subtext_config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub scheduler: Arc<AnnotationScheduler>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        oracle: Arc<dyn AnnotationOracle>,
        cache: Arc<dyn AnnotationCache>,
    ) -> Self {
        let scheduler = Arc::new(AnnotationScheduler::new(
            oracle,
            cache,
            config.pipeline.clone(),
        ));
        Self {
            config: Arc::new(config),
            scheduler,
        }
    }
}
