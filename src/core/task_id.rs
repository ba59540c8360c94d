//! Identifiers for every maintenance task, declared in execution order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Risk/dependency tier a task belongs to. Tiers run in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Snapshots and backups taken before anything changes.
    Safety,
    /// Package and firmware upgrades.
    Updates,
    /// Removal of unused packages, caches and old kernels.
    PackageCleanup,
    /// User caches, journal, temp files, coredumps, shell history.
    FilesystemCleanup,
    /// Bootloader, RPM database, units, fonts, TRIM, man pages.
    Optimization,
    /// Read-only health reporting.
    Health,
}

/// One discrete maintenance task.
///
/// Variant order is execution order; [`TaskId::ALL`] mirrors it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskId {
    Timeshift,
    Backup,
    Update,
    UpdateFirmware,
    Autoremove,
    CleanDnf,
    CleanKernels,
    CleanFlatpak,
    CleanSnap,
    CleanUserCache,
    CleanJournal,
    CleanTemp,
    CleanCoredumps,
    ClearHistory,
    UpdateGrub,
    OptimizeRpmdb,
    ResetFailedUnits,
    UpdateFonts,
    Trim,
    OptimizeFstrim,
    UpdateMandb,
    CheckServices,
}

impl TaskId {
    /// Every task in execution order.
    pub const ALL: [Self; 22] = [
        Self::Timeshift,
        Self::Backup,
        Self::Update,
        Self::UpdateFirmware,
        Self::Autoremove,
        Self::CleanDnf,
        Self::CleanKernels,
        Self::CleanFlatpak,
        Self::CleanSnap,
        Self::CleanUserCache,
        Self::CleanJournal,
        Self::CleanTemp,
        Self::CleanCoredumps,
        Self::ClearHistory,
        Self::UpdateGrub,
        Self::OptimizeRpmdb,
        Self::ResetFailedUnits,
        Self::UpdateFonts,
        Self::Trim,
        Self::OptimizeFstrim,
        Self::UpdateMandb,
        Self::CheckServices,
    ];

    /// Kebab-case name used in `--perform-<name>` / `--no-<name>`.
    #[must_use]
    pub const fn flag_name(self) -> &'static str {
        match self {
            Self::Timeshift => "timeshift",
            Self::Backup => "backup",
            Self::Update => "update",
            Self::UpdateFirmware => "update-firmware",
            Self::Autoremove => "autoremove",
            Self::CleanDnf => "clean-dnf",
            Self::CleanKernels => "clean-kernels",
            Self::CleanFlatpak => "clean-flatpak",
            Self::CleanSnap => "clean-snap",
            Self::CleanUserCache => "clean-user-cache",
            Self::CleanJournal => "clean-journal",
            Self::CleanTemp => "clean-temp",
            Self::CleanCoredumps => "clean-coredumps",
            Self::ClearHistory => "clear-history",
            Self::UpdateGrub => "update-grub",
            Self::OptimizeRpmdb => "optimize-rpmdb",
            Self::ResetFailedUnits => "reset-failed-units",
            Self::UpdateFonts => "update-fonts",
            Self::Trim => "trim",
            Self::OptimizeFstrim => "optimize-fstrim",
            Self::UpdateMandb => "update-mandb",
            Self::CheckServices => "check-services",
        }
    }

    /// Human-readable description shown in help and logs.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Timeshift => "Create a Timeshift snapshot",
            Self::Backup => "Back up configuration files and package lists",
            Self::Update => "Update system packages",
            Self::UpdateFirmware => "Update firmware (fwupdmgr)",
            Self::Autoremove => "Autoremove unused packages",
            Self::CleanDnf => "Clean DNF cache",
            Self::CleanKernels => "Remove old kernels",
            Self::CleanFlatpak => "Clean/update Flatpak",
            Self::CleanSnap => "Clean Snap packages",
            Self::CleanUserCache => "Clean user caches (thumbnails)",
            Self::CleanJournal => "Clean system journal",
            Self::CleanTemp => "Clean temp files",
            Self::CleanCoredumps => "Clean coredumps",
            Self::ClearHistory => "Clear shell history",
            Self::UpdateGrub => "Update GRUB/bootloader",
            Self::OptimizeRpmdb => "Optimize RPM database",
            Self::ResetFailedUnits => "Reset failed systemd units",
            Self::UpdateFonts => "Update font cache",
            Self::Trim => "Run SSD TRIM",
            Self::OptimizeFstrim => "Enable the fstrim timer",
            Self::UpdateMandb => "Update man database",
            Self::CheckServices => "Check service health",
        }
    }

    #[must_use]
    pub const fn tier(self) -> Tier {
        match self {
            Self::Timeshift | Self::Backup => Tier::Safety,
            Self::Update | Self::UpdateFirmware => Tier::Updates,
            Self::Autoremove
            | Self::CleanDnf
            | Self::CleanKernels
            | Self::CleanFlatpak
            | Self::CleanSnap => Tier::PackageCleanup,
            Self::CleanUserCache
            | Self::CleanJournal
            | Self::CleanTemp
            | Self::CleanCoredumps
            | Self::ClearHistory => Tier::FilesystemCleanup,
            Self::UpdateGrub
            | Self::OptimizeRpmdb
            | Self::ResetFailedUnits
            | Self::UpdateFonts
            | Self::Trim
            | Self::OptimizeFstrim
            | Self::UpdateMandb => Tier::Optimization,
            Self::CheckServices => Tier::Health,
        }
    }

    /// Member of the standard set: enabled by default and toggled by `--all`/`--none`.
    /// Risky tasks (snapshot, backup, firmware, history) are opt-in only.
    #[must_use]
    pub const fn is_standard(self) -> bool {
        !matches!(
            self,
            Self::Timeshift | Self::Backup | Self::UpdateFirmware | Self::ClearHistory
        )
    }

    /// Whether the task asks the confirmation gate before acting.
    #[must_use]
    pub const fn needs_confirmation(self) -> bool {
        matches!(
            self,
            Self::Update
                | Self::UpdateFirmware
                | Self::Autoremove
                | Self::CleanKernels
                | Self::ClearHistory
        )
    }

    /// Look up a task by its kebab-case flag name.
    #[must_use]
    pub fn from_flag_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.flag_name() == name)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag_name())
    }
}
