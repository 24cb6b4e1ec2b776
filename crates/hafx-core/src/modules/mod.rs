pub mod attenuation;
pub mod container;
pub mod dispersion;
pub mod serialization;
pub mod spectrum;
pub mod stack;
pub mod thermal;

mod traits;

pub use attenuation::{AttenuationProcess, AttenuationTable};
pub use container::SimulationContainer;
pub use dispersion::{KernelError, ResolutionModel};
pub use spectrum::FlareSpectrum;
pub use stack::{HafxStack, LayerDescription, MaterialLayer, StackDescription};
pub use thermal::{IdlBridgeSource, ThermalParameters};
pub use traits::{DetectorStack, ThermalSpectrumSource};
