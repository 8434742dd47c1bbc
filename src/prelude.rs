pub use crate::behavior::{BehaviorSource, BehaviorTable, ZoneBehavior};
pub use crate::calendar::{ClockEvent, ContextCalendarExt, Phase};
pub use crate::collector::{ContextCollectorExt, StatusCounts, StepCounts};
pub use crate::context::Context;
pub use crate::error::ModelError;
pub use crate::flows::{ContextFlowsExt, FlowRecord, FlowSource, InMemoryFlows};
pub use crate::geometry::{MultiPolygon, Point, Polygon};
pub use crate::global_properties::ContextGlobalPropertiesExt;
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::mobility::ContextMobilityExt;
pub use crate::model::{ModelInputs, ZoneInput};
pub use crate::parameters::{ContextParametersExt, InitialCondition, Parameters, ParametersValues};
pub use crate::people::{ContextPeopleExt, Decision, HealthStatus, PersonId};
pub use crate::random::{ContextRandomExt, ModelRng};
pub use crate::report::ContextReportExt;
pub use crate::spatial::{GridIndex, ProximityIndex};
pub use crate::transmission::ContextTransmissionExt;
pub use crate::zones::{ContextZonesExt, ZoneCode, ZoneId};
pub use crate::{define_data_plugin, define_global_property, define_report, define_rng};
