pub mod appearance;
pub mod computed;
pub mod feature;
pub mod layer;

pub use appearance::{
    AppearanceType, AppearanceValue, Appearances, ConditionsExpression, ExpressionContainer,
    LayerAppearance, StyleExpression,
};
pub use computed::{ComputedFeature, ComputedLayer, ComputedLayerStatus};
pub use feature::{DataRange, Feature};
pub use layer::{Data, GroupLayer, Layer, SimpleLayer};
