pub mod bounds;
pub mod camera;
pub mod canvas;
pub mod integrator;
pub mod lighting;
pub mod march;
pub mod math;
pub mod noise;
pub mod params;
pub mod parser;
pub mod ray;
pub mod sampler;
pub mod scene;
pub mod shapes;
pub mod transform;
