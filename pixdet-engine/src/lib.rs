pub mod plan;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum PlanError {
        #[error("无法以材料 '{material}' 构建部件 {part}")]
        UnknownMaterial { material: String, part: String },
    }
}

pub use errors::PlanError;
pub use plan::{
    BoxPlacement, BumpGrid, ConstructionPlan, GridLayout, HoleCut, ImplantGrid, SupportPlacement,
};
