//! Cloud Foundry service-key stages.
//!
//! Both stages submit a service-key operation and then poll the resulting
//! operation through the shared services monitor.

use crate::graph::{SubmitThenMonitorStage, TaskBinding};

pub const CLOUD_PROVIDER: &str = "cloudfoundry";

pub const DELETE_SERVICE_KEY_STAGE: &str = "deleteServiceKey";
pub const CREATE_SERVICE_KEY_STAGE: &str = "createServiceKey";

pub const DELETE_SERVICE_KEY_TASK: &str = "cloudfoundry.deleteServiceKey";
pub const CREATE_SERVICE_KEY_TASK: &str = "cloudfoundry.createServiceKey";
pub const MONITOR_SERVICES_TASK: &str = "cloudfoundry.monitorServices";

pub fn delete_service_key_stage() -> SubmitThenMonitorStage {
    SubmitThenMonitorStage::new(DELETE_SERVICE_KEY_STAGE)
        .bind(
            CLOUD_PROVIDER,
            TaskBinding::new("deleteServiceKey", DELETE_SERVICE_KEY_TASK),
            TaskBinding::new("monitorDeleteServiceKey", MONITOR_SERVICES_TASK),
        )
        .with_default_cloud_provider(CLOUD_PROVIDER)
}

pub fn create_service_key_stage() -> SubmitThenMonitorStage {
    SubmitThenMonitorStage::new(CREATE_SERVICE_KEY_STAGE)
        .bind(
            CLOUD_PROVIDER,
            TaskBinding::new("createServiceKey", CREATE_SERVICE_KEY_TASK),
            TaskBinding::new("monitorCreateServiceKey", MONITOR_SERVICES_TASK),
        )
        .with_default_cloud_provider(CLOUD_PROVIDER)
}
