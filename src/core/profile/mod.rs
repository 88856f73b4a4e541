pub mod launcher_profiles;
pub mod manager;

pub use launcher_profiles::{LauncherProfile, LauncherProfiles, LAUNCHER_PROFILES_FILE};
pub use manager::{
    generate_profile_id, read_profile_id, slugify, write_profile_id, ProfileManager, ProfileMeta,
    PROFILE_ID_FILE,
};
