//! Application callback invoked for every accepted request head.

use super::request::RequestHead;
use super::response::Response;

/// Produces the response for a request whose head passed every check.
///
/// Handlers never see refused requests; those are answered by the
/// connection before any handler runs.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: &RequestHead) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&RequestHead) -> Response + Send + Sync + 'static,
{
    fn call(&self, request: &RequestHead) -> Response {
        self(request)
    }
}

/// Default handler: `200 OK` with body `hello, world`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloWorld;

impl Handler for HelloWorld {
    fn call(&self, _request: &RequestHead) -> Response {
        Response::text("hello, world")
    }
}
