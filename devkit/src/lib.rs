/*!
# Netwatch DevKit - Stubs et Utilitaires pour Tests

Bibliothèque partagée par les tests du poller et du kernel:
- History store en mémoire avec pannes injectables
- Constructeur d'historiques horodatés
- Sorties netstat de référence
*/

pub mod fixtures;
pub mod history_stub;
pub mod test_utils;

pub use fixtures::{netstat_with_master, netstat_without_master, HistoryBuilder};
pub use history_stub::MemoryHistoryStore;
pub use test_utils::init_test_tracing;
