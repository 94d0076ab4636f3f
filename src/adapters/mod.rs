pub mod api_handler;
pub mod connection_pool;
pub mod health_handler;
pub mod http_executor;
pub mod mcp_client;
pub mod schema_validator;
pub mod vector_search;
