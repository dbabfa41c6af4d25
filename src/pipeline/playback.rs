//! 播放状态机 (PlaybackController)
//!
//! ```text
//!   Paused ──start──▶ Running ──pause/stop──▶ Paused
//!     │                  │ 流结束: 回到起点 ──▶ Paused
//!     └──────quit────────┴──────────────────▶ Stopped (终态)
//! ```
//!
//! 批处理模式固定为 `Running`, 不响应输入; 流结束即 `Stopped`。

use phf::phf_map;

use crate::renderer::{ControlButton, ControlLayout};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Stopped,
    Running,
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Running => "running",
            PlaybackState::Paused => "paused",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    Interactive,
    Batch,
}

/// 每轮轮询得到的一个输入事件
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Key(char),
    /// 帧像素坐标下的鼠标点击
    Click { x: f32, y: f32 },
    /// 窗口被关闭
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackCommand {
    Start,
    Pause,
    Quit,
}

/// 按键绑定
static KEY_BINDINGS: phf::Map<char, PlaybackCommand> = phf_map! {
    's' => PlaybackCommand::Start,
    'p' => PlaybackCommand::Pause,
    'q' => PlaybackCommand::Quit,
};

pub fn key_command(key: char) -> Option<PlaybackCommand> {
    KEY_BINDINGS.get(&key.to_ascii_lowercase()).copied()
}

pub struct PlaybackController {
    state: PlaybackState,
    mode: PlaybackMode,
    layout: ControlLayout,
}

impl PlaybackController {
    /// 交互模式: 初始为 `Paused` (显示第一帧) 或 `Running`
    pub fn interactive(start_running: bool, layout: ControlLayout) -> Self {
        let state = if start_running {
            PlaybackState::Running
        } else {
            PlaybackState::Paused
        };
        Self {
            state,
            mode: PlaybackMode::Interactive,
            layout,
        }
    }

    pub fn batch() -> Self {
        Self {
            state: PlaybackState::Running,
            mode: PlaybackMode::Batch,
            layout: ControlLayout::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn layout(&self) -> &ControlLayout {
        &self.layout
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    /// 事件 → 命令 (不改变状态)
    pub fn command_for(&self, event: InputEvent) -> Option<PlaybackCommand> {
        match event {
            InputEvent::Key(key) => key_command(key),
            InputEvent::Click { x, y } => match self.layout.hit(x, y)? {
                ControlButton::Start => Some(PlaybackCommand::Start),
                ControlButton::Stop => Some(PlaybackCommand::Pause),
            },
            InputEvent::Closed => Some(PlaybackCommand::Quit),
        }
    }

    /// 处理一个输入事件, 返回实际执行的命令
    ///
    /// 批处理模式与 `Stopped` 状态下忽略所有输入。
    pub fn handle(&mut self, event: InputEvent) -> Option<PlaybackCommand> {
        if self.mode == PlaybackMode::Batch || self.is_stopped() {
            return None;
        }
        let command = self.command_for(event)?;
        self.apply(command);
        Some(command)
    }

    /// 直接执行命令 (中断信号等非输入来源)
    pub fn apply(&mut self, command: PlaybackCommand) {
        if self.is_stopped() {
            return;
        }
        self.state = match command {
            PlaybackCommand::Start => PlaybackState::Running,
            PlaybackCommand::Pause => PlaybackState::Paused,
            PlaybackCommand::Quit => PlaybackState::Stopped,
        };
    }

    /// 流结束: 交互模式暂停 (调用方负责回到起点), 批处理模式结束
    pub fn end_of_stream(&mut self) -> PlaybackState {
        self.state = match (self.mode, self.state) {
            (_, PlaybackState::Stopped) => PlaybackState::Stopped,
            (PlaybackMode::Batch, _) => PlaybackState::Stopped,
            (PlaybackMode::Interactive, _) => PlaybackState::Paused,
        };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(start_running: bool) -> PlaybackController {
        PlaybackController::interactive(start_running, ControlLayout::default())
    }

    #[test]
    fn test_initial_states() {
        assert_eq!(controller(false).state(), PlaybackState::Paused);
        assert_eq!(controller(true).state(), PlaybackState::Running);
        assert_eq!(PlaybackController::batch().state(), PlaybackState::Running);
    }

    #[test]
    fn test_key_transitions() {
        let mut pc = controller(false);
        assert_eq!(pc.handle(InputEvent::Key('s')), Some(PlaybackCommand::Start));
        assert!(pc.is_running());
        pc.handle(InputEvent::Key('P'));
        assert_eq!(pc.state(), PlaybackState::Paused);
        assert_eq!(pc.handle(InputEvent::Key('x')), None);
        assert_eq!(pc.state(), PlaybackState::Paused);
        pc.handle(InputEvent::Key('q'));
        assert!(pc.is_stopped());
    }

    #[test]
    fn test_button_clicks() {
        let mut pc = controller(false);
        pc.handle(InputEvent::Click { x: 50.0, y: 120.0 });
        assert!(pc.is_running());
        pc.handle(InputEvent::Click { x: 190.0, y: 120.0 });
        assert_eq!(pc.state(), PlaybackState::Paused);
        assert_eq!(pc.handle(InputEvent::Click { x: 600.0, y: 600.0 }), None);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut pc = controller(true);
        pc.handle(InputEvent::Closed);
        assert!(pc.is_stopped());
        assert_eq!(pc.handle(InputEvent::Key('s')), None);
        pc.apply(PlaybackCommand::Start);
        assert_eq!(pc.end_of_stream(), PlaybackState::Stopped);
    }

    #[test]
    fn test_end_of_stream() {
        let mut pc = controller(true);
        assert_eq!(pc.end_of_stream(), PlaybackState::Paused);

        let mut batch = PlaybackController::batch();
        assert_eq!(batch.handle(InputEvent::Key('p')), None);
        assert!(batch.is_running());
        assert_eq!(batch.end_of_stream(), PlaybackState::Stopped);
    }
}
