/// Type-state markers for the socket builder
///
/// The endpoint is the only required setting; `build()` only exists once it
/// has been provided.

/// Marker trait for endpoint state
pub trait EndpointState {}

/// Endpoint has not been set
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// Endpoint has been set
pub struct HasEndpoint;
impl EndpointState for HasEndpoint {}
