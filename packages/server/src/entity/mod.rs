pub mod build_request;
pub mod image;
pub mod image_architecture;
pub mod request_state;
