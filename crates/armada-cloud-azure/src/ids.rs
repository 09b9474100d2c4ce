//! ARM ID shapes of the compute resource kinds

use armada_cloud::{IdShape, SegmentSpec};

const SUBSCRIPTION: SegmentSpec = SegmentSpec::user("subscriptions", "subscriptionId");
const RESOURCE_GROUP: SegmentSpec = SegmentSpec::user("resourceGroups", "resourceGroupName");
const COMPUTE: SegmentSpec = SegmentSpec::fixed("providers", "providerName", "Microsoft.Compute");

pub static AVAILABILITY_SET: IdShape = IdShape::new(
    "Availability Set",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("availabilitySets", "availabilitySetName"),
    ],
);

pub static PROXIMITY_PLACEMENT_GROUP: IdShape = IdShape::new(
    "Proximity Placement Group",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("proximityPlacementGroups", "proximityPlacementGroupName"),
    ],
);

pub static MANAGED_DISK: IdShape = IdShape::new(
    "Managed Disk",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("disks", "diskName"),
    ],
);

pub static SSH_PUBLIC_KEY: IdShape = IdShape::new(
    "SSH Public Key",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("sshPublicKeys", "sshPublicKeyName"),
    ],
);

pub static DEDICATED_HOST_GROUP: IdShape = IdShape::new(
    "Dedicated Host Group",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("hostGroups", "hostGroupName"),
    ],
);

pub static DEDICATED_HOST: IdShape = IdShape::new(
    "Dedicated Host",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("hostGroups", "hostGroupName"),
        SegmentSpec::user("hosts", "hostName"),
    ],
);

pub static SHARED_IMAGE_GALLERY: IdShape = IdShape::new(
    "Shared Image Gallery",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("galleries", "galleryName"),
    ],
);

pub static SHARED_IMAGE: IdShape = IdShape::new(
    "Shared Image",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("galleries", "galleryName"),
        SegmentSpec::user("images", "imageName"),
    ],
);

pub static SHARED_IMAGE_VERSION: IdShape = IdShape::new(
    "Shared Image Version",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("galleries", "galleryName"),
        SegmentSpec::user("images", "imageName"),
        SegmentSpec::user("versions", "versionName"),
    ],
);

/// A managed (non-gallery) image, the source of a shared image version
pub static MANAGED_IMAGE: IdShape = IdShape::new(
    "Image",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        COMPUTE,
        SegmentSpec::user("images", "imageName"),
    ],
);
