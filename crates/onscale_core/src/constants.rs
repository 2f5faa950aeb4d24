pub mod routes {
    pub const USER_DETAILS: &str = "/user/details";

    pub const ACCOUNT_LIST: &str = "/account/list";
    pub const ACCOUNT_HPC_LIST: &str = "/account/hpc/list";
    pub const ACCOUNT_BALANCE: &str = "/account/balance";

    pub const JOB_INIT: &str = "/job/init";
    pub const JOB_LOAD: &str = "/job/load";
    pub const JOB_LIST: &str = "/job/list/load/combined";
    pub const JOB_SUBMIT: &str = "/job/submit";
    pub const JOB_RENAME: &str = "/job/update/name";
    pub const JOB_ESTIMATE: &str = "/job/estimate";
    pub const JOB_STOP: &str = "/job/stop";
    pub const JOB_SIMULATION_STOP: &str = "/job/simulation/stop";
    pub const JOB_PROGRESS: &str = "/job/progress";
    pub const JOB_FILES: &str = "/job/files/list/{id}";
    pub const JOB_UPLOAD_URL: &str = "/job/files/uploadUrl/{id}";

    pub const BLOB_LIST: &str = "/blob/list/{id}";
    pub const BLOB_UPLOAD: &str = "/blob/upload";

    pub const TAG_JOB: &str = "/tag/job";
    pub const TAG_LIST: &str = "/tag/list";

    pub const SOCKET_USER: &str = "/socket/user";
}

pub mod files {
    /// Name of the generated metadata file that accompanies every upload bundle.
    pub const METADATA_FILE_NAME: &str = "simulationMetadata.json";

    /// Placeholders substituted into presigned upload requests.
    pub const PLACEHOLDER_FILE_NAME: &str = "#fileName#";
    pub const PLACEHOLDER_URL_ENCODED_FILE_NAME: &str = "#urlEncodedFileName#";
    pub const PLACEHOLDER_FILE_SIZE: &str = "#fileSize#";
}

pub mod defaults {
    pub const TAG_TYPE: &str = "ProjectTag";
    pub const APPLICATION: &str = "onscalepython";
    pub const DOCKER_TAG: &str = "default";

    /// Core count above which a job has to run multi-node, when the HPC doesn't say.
    pub const MNMPI_CORES_AWS: u32 = 70;
    pub const MNMPI_CORES_OTHER: u32 = 58;

    /// Estimates with more parts than this run as `2 * parts` cores.
    pub const MNMPI_PARTS_THRESHOLD: u32 = 31;

    /// Environment variable naming the profile to use when none is given.
    pub const PROFILE_ENV: &str = "ONSCALE_DEFAULT_PROFILE";
}
