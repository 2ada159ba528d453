use crate::hi::assembler::FastcgiRequest;
use crate::hi::response::Response;

/// Application callback, invoked once for each request whose stdin stream has ended.
///
/// The request is handed over by value. Output goes through `response`; if the handler returns
/// without calling `Response::end_request`, the connection ends the request on its behalf.
pub trait FastcgiRequestHandler {
    fn call(&self, request: FastcgiRequest, response: &mut Response<'_>);
}
