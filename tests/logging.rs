//! Subscriber installation, in its own test binary since it sets the
//! process-wide subscriber.

use btp_reconcile::try_init_logging;

#[test]
fn test_try_init_logging_only_installs_once() {
    assert!(try_init_logging());
    assert!(!try_init_logging());
    tracing::info!("logging initialised");
}
