use derive_new::new;

use crate::config::TrendingConfig;
use crate::database::Backend;
use crate::service::aggregator::Aggregator;
use crate::service::directory::Directory;
use crate::service::query::TrendingQuery;
use crate::service::trending::TrendingIndex;
use crate::service::view_store::ViewStore;
use crate::service::visibility::VisibilityFilter;

#[derive(Debug, Clone, new)]
pub struct App {
    pub backend: Backend,
    pub trending: TrendingIndex,
    pub views: ViewStore,
    pub aggregator: Aggregator,
    pub query: TrendingQuery,
    pub directory: Directory,
}

pub fn create_app(backend: Backend, config: TrendingConfig) -> App {
    let trending = TrendingIndex::new(backend.clone(), config);
    let aggregator = Aggregator::new(backend.clone());
    let views = ViewStore::new(backend.clone(), aggregator.clone(), trending.clone());
    let query = TrendingQuery::new(trending.clone(), VisibilityFilter::new(backend.clone()));
    let directory = Directory::new(backend.clone(), trending.clone());

    App {
        backend,
        trending,
        views,
        aggregator,
        query,
        directory,
    }
}
