/*!
Utilitaires de tests partagés par le poller et le kernel
*/

use tracing_subscriber::EnvFilter;

/// Active les logs `tracing` dans la sortie des tests (idempotent)
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
