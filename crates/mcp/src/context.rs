/// Values bound from one request's headers, handed to every tool
/// handler invoked while serving that request.
///
/// The context travels as an explicit argument rather than ambient
/// task-local state, so concurrent requests cannot observe each other's
/// values by construction, and teardown is the request's own drop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Microsoft Graph bearer token: `X-Microsoft-Graph-Token`,
    /// `X-Graph-Token`, or the `Authorization: Bearer` fallback.
    pub graph_token: Option<String>,
    /// `X-GitHub-Username`.
    pub github_username: Option<String>,
    /// `X-Request-Id`.
    pub request_id: Option<String>,
}
