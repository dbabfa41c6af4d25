//! 仪表盘统计: 帧率、CPU/GPU 占用、计数

use std::process::Command;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use sysinfo::System;
use tracing::debug;

/// 渲染帧率: 两次渲染之间的墙钟间隔的倒数, 第一次为 0
#[derive(Debug, Default)]
pub struct FpsMeter {
    last: Option<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f64 {
        let fps = match self.last {
            Some(prev) => {
                let delta = now.saturating_duration_since(prev).as_secs_f64();
                if delta > 0.0 {
                    1.0 / delta
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last = Some(now);
        fps
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DashboardStats {
    pub fps: f64,
    pub cpu: String,
    pub gpu: String,
    pub counts: IndexMap<String, usize>,
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            fps: 0.0,
            cpu: "N/A".to_string(),
            gpu: "N/A".to_string(),
            counts: IndexMap::new(),
        }
    }
}

impl DashboardStats {
    pub fn fps_text(&self) -> String {
        format!("FPS: {:.1}", self.fps)
    }

    pub fn cpu_text(&self) -> String {
        format!("CPU: {}", self.cpu)
    }

    pub fn gpu_text(&self) -> String {
        format!("GPU: {}", self.gpu)
    }
}

/// 系统资源查询
pub trait ResourceProbe {
    /// 例如 `"37.5%"`
    fn cpu_usage(&mut self) -> String;

    /// 例如 `"12%"`; CPU 推理时为 `"N/A"`, 查询失败为 `"Err"`
    fn gpu_usage(&mut self) -> String;
}

/// 固定值, 用于测试与无窗口场景
#[derive(Clone, Debug)]
pub struct StaticProbe {
    pub cpu: String,
    pub gpu: String,
}

impl Default for StaticProbe {
    fn default() -> Self {
        Self {
            cpu: "N/A".to_string(),
            gpu: "N/A".to_string(),
        }
    }
}

impl ResourceProbe for StaticProbe {
    fn cpu_usage(&mut self) -> String {
        self.cpu.clone()
    }

    fn gpu_usage(&mut self) -> String {
        self.gpu.clone()
    }
}

/// sysinfo (CPU) + nvidia-smi (GPU)
///
/// 查询结果缓存 `interval`, 避免每帧启动 nvidia-smi 进程。
pub struct SystemProbe {
    system: System,
    gpu_id: Option<i32>,
    interval: Duration,
    cached: Option<(Instant, String, String)>,
}

impl SystemProbe {
    /// `gpu_id` 为 `None` 表示 CPU 推理, GPU 显示 `N/A`
    pub fn new(gpu_id: Option<i32>) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system,
            gpu_id,
            interval: Duration::from_millis(500),
            cached: None,
        }
    }

    fn refresh(&mut self) -> (String, String) {
        if let Some((at, cpu, gpu)) = &self.cached {
            if at.elapsed() < self.interval {
                return (cpu.clone(), gpu.clone());
            }
        }
        self.system.refresh_cpu_usage();
        let cpu = format!("{:.1}%", self.system.global_cpu_usage());
        let gpu = match self.gpu_id {
            Some(id) => query_nvidia_smi(id),
            None => "N/A".to_string(),
        };
        self.cached = Some((Instant::now(), cpu.clone(), gpu.clone()));
        (cpu, gpu)
    }
}

impl ResourceProbe for SystemProbe {
    fn cpu_usage(&mut self) -> String {
        self.refresh().0
    }

    fn gpu_usage(&mut self) -> String {
        self.refresh().1
    }
}

fn query_nvidia_smi(gpu_id: i32) -> String {
    let id = gpu_id.to_string();
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=utilization.gpu",
            "--format=csv,noheader,nounits",
            "-i",
            id.as_str(),
        ])
        .output();
    match output {
        Ok(out) if out.status.success() => {
            parse_gpu_utilization(&String::from_utf8_lossy(&out.stdout))
        }
        Ok(out) => {
            debug!("nvidia-smi 退出码 {:?}", out.status.code());
            "Err".to_string()
        }
        Err(e) => {
            debug!("nvidia-smi 不可用: {}", e);
            "Err".to_string()
        }
    }
}

/// nvidia-smi 输出的第一行 → `"NN%"`
pub fn parse_gpu_utilization(output: &str) -> String {
    output
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<u32>().ok())
        .map_or_else(|| "Err".to_string(), |v| format!("{}%", v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_from_wall_clock_delta() {
        let mut meter = FpsMeter::new();
        let t0 = Instant::now();
        assert_eq!(meter.tick_at(t0), 0.0);
        let fps = meter.tick_at(t0 + Duration::from_millis(40));
        assert!((fps - 25.0).abs() < 1e-6);
        assert_eq!(meter.tick_at(t0 + Duration::from_millis(40)), 0.0);
    }

    #[test]
    fn test_parse_gpu_utilization() {
        assert_eq!(parse_gpu_utilization("37\n"), "37%");
        assert_eq!(parse_gpu_utilization(" 5 \n80\n"), "5%");
        assert_eq!(parse_gpu_utilization("No devices were found"), "Err");
        assert_eq!(parse_gpu_utilization(""), "Err");
    }

    #[test]
    fn test_cpu_probe_reports_na_gpu() {
        let mut probe = SystemProbe::new(None);
        assert_eq!(probe.gpu_usage(), "N/A");
        assert!(probe.cpu_usage().ends_with('%'));
    }

    #[test]
    fn test_dashboard_texts() {
        let stats = DashboardStats {
            fps: 29.97,
            cpu: "12.0%".into(),
            ..Default::default()
        };
        assert_eq!(stats.fps_text(), "FPS: 30.0");
        assert_eq!(stats.cpu_text(), "CPU: 12.0%");
        assert_eq!(stats.gpu_text(), "GPU: N/A");
    }
}
