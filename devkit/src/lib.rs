/*!
# MaskIndex DevKit - Fixtures pour tester le pipeline masque

Bibliothèque facilitant les tests du kernel avec:
- Répertoire fetch_track jetable (conf, pedestrian_meta/, script)
- Faux outil fetch_track qui dépose des fichiers de détection
- Construction de lignes de détection JSON
*/

pub mod detection;
pub mod fixture;

pub use detection::DetectionLineBuilder;
pub use fixture::FetchTrackFixture;
