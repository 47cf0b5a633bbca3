pub mod encoding;
pub mod remote_client;
pub mod vision_service;
