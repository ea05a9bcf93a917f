pub mod camera;
pub mod collision;
pub mod passes;
pub mod portal;
pub mod scene;
pub mod transform;
pub mod view;
