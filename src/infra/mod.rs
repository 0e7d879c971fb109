pub mod description_client;
pub mod http_client;
