//! Metric keys: operation classes and semantic error kinds.

/// Class of external call, metered as a count/latency/error triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Identity login
    Auth,
    /// Device manager writes (devices, device types, hubs)
    DeviceMetaUpdate,
    /// Device repository reads
    DeviceRepoRequest,
    /// Permission/search index queries
    PermissionsRequest,
    /// Last-value queries
    DeviceDataRequest,
    /// Broker connect
    ConnectorLogin,
    /// Broker subscribe
    ConnectorSubscribe,
    /// Broker publish
    ConnectorPublish,
    NotificationPublish,
    NotificationRead,
    NotificationDelete,
    /// Prepared-deployment projection reads
    ProcessPreparedDeployment,
    ProcessDeployment,
    ProcessStart,
    /// Deployment/instance listing and cleanup
    ProcessRequest,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Auth,
        Operation::DeviceMetaUpdate,
        Operation::DeviceRepoRequest,
        Operation::PermissionsRequest,
        Operation::DeviceDataRequest,
        Operation::ConnectorLogin,
        Operation::ConnectorSubscribe,
        Operation::ConnectorPublish,
        Operation::NotificationPublish,
        Operation::NotificationRead,
        Operation::NotificationDelete,
        Operation::ProcessPreparedDeployment,
        Operation::ProcessDeployment,
        Operation::ProcessStart,
        Operation::ProcessRequest,
    ];

    /// Metric name stem, without prefix or suffix.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Auth => "auth",
            Operation::DeviceMetaUpdate => "device_meta_update",
            Operation::DeviceRepoRequest => "device_repo_request",
            Operation::PermissionsRequest => "permissions_request",
            Operation::DeviceDataRequest => "device_data_request",
            Operation::ConnectorLogin => "connector_login",
            Operation::ConnectorSubscribe => "connector_subscribe",
            Operation::ConnectorPublish => "connector_publish",
            Operation::NotificationPublish => "notification_publish",
            Operation::NotificationRead => "notification_read",
            Operation::NotificationDelete => "notification_delete",
            Operation::ProcessPreparedDeployment => "process_prepared_deployment",
            Operation::ProcessDeployment => "process_deployment",
            Operation::ProcessStart => "process_start",
            Operation::ProcessRequest => "process_request",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Assertion on remote state that can fail without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unexpected {
    /// Device reported online when it should be offline
    DeviceOnlineState,
    /// Device reported offline when it should be online
    DeviceOfflineState,
    /// Permission index returned a stale device name
    PermissionsMetadata,
    /// Device repository returned a stale device name
    DeviceRepoMetadata,
    /// Last value differs from the published value
    DeviceData,
    /// Sent notification missing from the listing
    NotificationState,
    /// Process instance missing or not completed
    ProcessInstanceState,
    /// No command reached the device during the process run
    ProcessCommandCount,
    /// Device or service not selectable in the prepared deployment
    ProcessPreparedDeploymentSelectables,
    /// Encoding, decoding and internal failures
    Uncategorized,
}

impl Unexpected {
    pub const ALL: [Unexpected; 10] = [
        Unexpected::DeviceOnlineState,
        Unexpected::DeviceOfflineState,
        Unexpected::PermissionsMetadata,
        Unexpected::DeviceRepoMetadata,
        Unexpected::DeviceData,
        Unexpected::NotificationState,
        Unexpected::ProcessInstanceState,
        Unexpected::ProcessCommandCount,
        Unexpected::ProcessPreparedDeploymentSelectables,
        Unexpected::Uncategorized,
    ];

    /// Full counter name, without prefix.
    pub fn name(self) -> &'static str {
        match self {
            Unexpected::DeviceOnlineState => "unexpected_device_online_state_err",
            Unexpected::DeviceOfflineState => "unexpected_device_offline_state_err",
            Unexpected::PermissionsMetadata => "unexpected_permissions_metadata_err",
            Unexpected::DeviceRepoMetadata => "unexpected_device_repo_metadata_err",
            Unexpected::DeviceData => "unexpected_device_data_err",
            Unexpected::NotificationState => "unexpected_notification_state_err",
            Unexpected::ProcessInstanceState => "unexpected_process_instance_state_err",
            Unexpected::ProcessCommandCount => "process_unexpected_command_count_err",
            Unexpected::ProcessPreparedDeploymentSelectables => {
                "process_unexpected_prepared_deployment_selectables_err"
            }
            Unexpected::Uncategorized => "uncategorized_err",
        }
    }

    pub(crate) fn help(self) -> &'static str {
        match self {
            Unexpected::DeviceOnlineState => "device unexpectedly online",
            Unexpected::DeviceOfflineState => "device unexpectedly offline",
            Unexpected::PermissionsMetadata => "unexpected device metadata in permission index",
            Unexpected::DeviceRepoMetadata => "unexpected device metadata in device repository",
            Unexpected::DeviceData => "unexpected last value of device",
            Unexpected::NotificationState => "sent notification not found",
            Unexpected::ProcessInstanceState => "process instance missing or not completed",
            Unexpected::ProcessCommandCount => "no command received during process run",
            Unexpected::ProcessPreparedDeploymentSelectables => {
                "canary device or service not selectable in prepared deployment"
            }
            Unexpected::Uncategorized => "uncategorized errors",
        }
    }
}

impl std::fmt::Display for Unexpected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
