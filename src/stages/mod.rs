mod extract;
mod upscale;
mod reassemble;
mod cleanup;

pub use extract::Extract;
pub use upscale::Upscale;
pub use reassemble::Reassemble;
pub use cleanup::Cleanup;
