//! Builder type-states
//!
//! A client needs somewhere to connect to, so `build()` only exists on
//! [`WithEndpoint`]. Both `url()` and `config()` move the builder there.

pub trait EndpointState {}

/// No URL yet
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// URL set, ready to build
pub struct WithEndpoint;
impl EndpointState for WithEndpoint {}
