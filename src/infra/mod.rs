mod anchore_engine_client;
mod anchore_engine_response;
mod component_factory_impl;

pub use anchore_engine_client::{AnchoreAPIToken, AnchoreEngineClient, TransportOptions};
pub use component_factory_impl::ConcreteComponentFactory;
