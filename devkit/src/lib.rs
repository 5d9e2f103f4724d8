/*!
# WakeHub DevKit - Fixtures et utilitaires de test

Bibliothèque facilitant les tests du kernel avec:
- Sink UDP local qui enregistre les datagrammes reçus (magic packets)
- Builders JSON d'appareils et de groupes
- Harness avec dossier temporaire et expectations sur les paquets
*/

pub mod udp_sink;
pub mod fixtures;
pub mod test_utils;

pub use udp_sink::UdpSink;
pub use fixtures::{DeviceBuilder, GroupBuilder};
pub use test_utils::TestHarness;
