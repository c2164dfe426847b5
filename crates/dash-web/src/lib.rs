pub mod error;
pub mod limit;
pub mod model;
pub mod routes;
pub mod server;
pub mod state;

pub use error::WebError;
pub use limit::{parse_rate_limit_spec, RateLimit};
pub use model::Envelope;
pub use routes::{router, API_VERSION, SERVICE_NAME};
pub use server::run_web_server;
pub use state::WebState;

#[cfg(test)]
mod tests {
    use super::{parse_rate_limit_spec, API_VERSION, SERVICE_NAME};

    #[test]
    fn crate_root_reexports_service_constants() {
        assert_eq!(SERVICE_NAME, "agent-dashboard");
        assert_eq!(API_VERSION, "v1");
        assert_eq!(parse_rate_limit_spec("60"), Ok((60, 10)));
    }
}
