use std::sync::Arc;

use crate::stream::StreamService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StreamService>,
}

impl AppState {
    pub fn new(service: Arc<StreamService>) -> Self {
        Self { service }
    }
}
