use std::path::PathBuf;

use crate::{arch::Arch, config::PhysAddr};

xflags::xflags! {
    /// Build, convert and boot the kernel.
    cmd xtask {
        default cmd help {
            /// Print help information.
            optional -h, --help
        }

        /// Build the kernel.
        cmd build {
            optional --arch arch: Arch
            /// Use the debug profile instead of release.
            optional --debug
            /// Log the commands instead of running them.
            optional --dry-run
        }

        /// Build the kernel and convert it into a flat binary image.
        cmd image {
            optional --arch arch: Arch
            optional --debug
            optional --dry-run
        }

        /// Build and convert the user applications.
        cmd apps {
            optional --arch arch: Arch
            optional --debug
            optional --dry-run
        }

        /// Build, convert and boot the kernel under QEMU.
        cmd run {
            optional --arch arch: Arch
            optional --debug
            optional --dry-run
            /// Build the user applications before the kernel.
            optional --apps
            /// Halt at startup and wait for gdb on tcp::1234.
            optional --gdb
            /// Firmware image handed to `-bios`.
            optional --bootloader path: PathBuf
            /// Physical address the kernel image is loaded at.
            optional --load-addr addr: PhysAddr
        }
    }
}
