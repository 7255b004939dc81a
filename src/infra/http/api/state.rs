use std::sync::Arc;

use crate::application::services::Services;
use crate::config::SiteSettings;

#[derive(Clone)]
pub struct ApiState {
    pub services: Services,
    pub site: Arc<SiteSettings>,
}

impl ApiState {
    pub fn new(services: Services, site: SiteSettings) -> Self {
        Self {
            services,
            site: Arc::new(site),
        }
    }
}
