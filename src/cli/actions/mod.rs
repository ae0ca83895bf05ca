pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
        max_failed_attempts: i32,
        lockout_seconds: i64,
    },
}
