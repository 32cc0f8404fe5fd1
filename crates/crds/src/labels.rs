//! Well-known label and annotation keys

/// Label carrying the cluster ID a machine belongs to
pub const MACHINE_CLUSTER_ID_LABEL: &str = "machine.openshift.io/cluster-api-cluster";

/// Label carrying the owning MachineSet name
pub const MACHINE_SET_LABEL: &str = "machine.openshift.io/cluster-api-machineset";

/// Label carrying the machine role ("master", "worker", ...)
pub const MACHINE_ROLE_LABEL: &str = "machine.openshift.io/cluster-api-machine-role";

/// Role value identifying control-plane machines
pub const MACHINE_ROLE_MASTER: &str = "master";

/// Label marking a machine backed by a preemptible (spot) instance
pub const INTERRUPTIBLE_INSTANCE_LABEL: &str = "machine.openshift.io/interruptible-instance";

/// Region the instance runs in
pub const REGION_LABEL: &str = "machine.openshift.io/region";

/// Comma-joined availability zones of the instance
pub const ZONE_LABEL: &str = "machine.openshift.io/zone";

/// Hardware profile of the instance
pub const INSTANCE_TYPE_LABEL: &str = "machine.openshift.io/instance-type";

/// Annotation mirroring the observed instance state
pub const INSTANCE_STATE_ANNOTATION: &str = "machine.openshift.io/instance-state";

/// Finalizer held on Machines until cloud resources are released
pub const MACHINE_FINALIZER: &str = "machine.machine.openshift.io";
