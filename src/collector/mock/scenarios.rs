//! Pre-built mock scenarios for testing.
//!
//! `samples` holds tegrastats lines captured from real boards; the `MockFs`
//! constructors lay out a board's `/proc`, `/sys` and log file around them.

use super::filesystem::MockFs;
use crate::collector::traits::FsUsage;

/// Captured tegrastats lines, one per board generation.
pub mod samples {
    /// Jetson Nano, L4T 32.x.
    pub const NANO: &str = "RAM 2015/3964MB (lfb 98x4MB) SWAP 29/1982MB (cached 3MB) CPU [6%@102,5%@102,4%@102,3%@102] EMC_FREQ 0% GR3D_FREQ 0% PLL@28C CPU@31.5C PMIC@100C GPU@30.5C AO@36C thermal@31.25C POM_5V_IN 1388/1388 POM_5V_GPU 122/122 POM_5V_CPU 163/163";

    /// Jetson TX2 with the Denver cluster powered down.
    pub const TX2: &str = "RAM 2257/7846MB (lfb 1099x4MB) SWAP 0/3923MB (cached 0MB) CPU [2%@345,off,off,1%@345,0%@345,0%@345] EMC_FREQ 3%@1866 GR3D_FREQ 0%@114 APE 150 PLL@34.5C MCPU@34.5C PMIC@100C Tboard@30C GPU@32.5C BCPU@34.5C thermal@33.2C Tdiode@31.5C VDD_SYS_GPU 152/152 VDD_SYS_SOC 686/686 VDD_4V0_WIFI 0/0 VDD_IN 2515/2515 VDD_SYS_CPU 229/229 VDD_SYS_DDR 275/275";

    /// Jetson Xavier NX in a 4-core power mode, with hardware decoding active.
    pub const XAVIER_NX: &str = "RAM 3432/7763MB (lfb 2x4MB) SWAP 0/3881MB (cached 0MB) CPU [3%@1190,2%@1190,1%@1190,0%@1190,off,off] EMC_FREQ 0%@1600 GR3D_FREQ 0%@306 NVDEC 115 APE 150 MTS fg 0% bg 1% AO@35.5C GPU@36C PMIC@100C AUX@35C CPU@37C thermal@35.9C VDD_IN 4190/4190 VDD_CPU_GPU_CV 573/573 VDD_SOC 1316/1316";

    /// Jetson AGX Orin, JetPack 5: per-GPC clocks, unit-suffixed rails, idle sensors at -256C.
    pub const ORIN: &str = "RAM 5123/30536MB (lfb 5617x4MB) SWAP 0/15268MB (cached 0MB) CPU [1%@729,0%@729,0%@729,0%@729,2%@2201,0%@2201,0%@2201,0%@2201] EMC_FREQ 0%@2133 GR3D_FREQ 0%@[305,305] VIC_FREQ 115 APE 174 CV0@-256C CPU@46.093C SOC2@42.5C SOC0@43.5C CV1@-256C GPU@-256C tj@46.093C SOC1@42.875C CV2@-256C VDD_GPU_SOC 2383mW/2383mW VDD_CPU_CV 397mW/397mW VIN_SYS_5V0 3428mW/3428mW";

    /// Jetson TK1, L4T 21.x: shared CPU clock and IRAM block.
    pub const TK1: &str = "RAM 1083/1925MB (lfb 57x4MB) IRAM 0/252kB (lfb 252kB) CPU [12%,4%,off,off]@1092 EMC 7%@792 AVP 47%@204 VDE 120 GR3D 0%@72";

    /// What tegrastats prints when the debugfs clocks are not readable.
    pub const GARBAGE: &str = "tegrastats: failed to open /sys/kernel/debug/clock/emc/rate";
}

/// Default log location used by the scenarios.
pub const SCENARIO_LOG: &str = "/var/log/tegrastats.log";

impl MockFs {
    /// A Jetson Nano with tegrastats installed, four cores on `schedutil`,
    /// root and boot partitions mounted, and a log holding a few samples.
    pub fn jetson_nano() -> Self {
        let fs = Self::board(4, "schedutil");
        fs.add_file(
            SCENARIO_LOG,
            format!("{}\n{}\n", samples::NANO, samples::NANO),
        );
        fs
    }

    /// A Jetson TX2 where cores 2 and 3 (Denver) are hot-unplugged and
    /// therefore have no cpufreq directory.
    pub fn jetson_tx2() -> Self {
        let fs = Self::board(0, "schedutil");
        for cpu in [0, 3, 4, 5] {
            fs.add_file(
                format!("/sys/devices/system/cpu/cpu{cpu}/cpufreq/scaling_governor"),
                "schedutil\n",
            );
        }
        fs.add_file(SCENARIO_LOG, format!("{}\n", samples::TX2));
        fs
    }

    fn board(cores: usize, governor: &str) -> Self {
        let fs = Self::new();
        fs.add_file("/usr/bin/tegrastats", "");
        fs.add_file("/proc/uptime", "350735.47 234388.90\n");
        fs.add_file(
            "/proc/mounts",
            "\
/dev/mmcblk0p1 / ext4 rw,relatime,data=ordered 0 0
devtmpfs /dev devtmpfs rw,relatime,size=1885616k,nr_inodes=471404,mode=755 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,mode=755 0 0
/dev/mmcblk0p1 /var/lib/docker/overlay ext4 rw,relatime 0 0
/dev/sda1 /mnt/usb\\040drive vfat rw,relatime 0 0
",
        );
        fs.set_fs_usage(
            "/",
            FsUsage {
                total: 31_154_233_344,
                used: 14_567_890_944,
                free: 15_000_000_000,
            },
        );
        fs.set_fs_usage(
            "/var/lib/docker/overlay",
            FsUsage {
                total: 31_154_233_344,
                used: 14_567_890_944,
                free: 15_000_000_000,
            },
        );
        fs.set_fs_usage(
            "/mnt/usb drive",
            FsUsage {
                total: 8_000_000_000,
                used: 2_000_000_000,
                free: 6_000_000_000,
            },
        );
        for cpu in 0..cores {
            fs.add_file(
                format!("/sys/devices/system/cpu/cpu{cpu}/cpufreq/scaling_governor"),
                format!("{governor}\n"),
            );
        }
        fs
    }
}
