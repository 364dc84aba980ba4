//! 收到帧的显示

use chrono::{Local, NaiveTime};
use relay_protocol::Frame;

/// 帧显示
pub trait Presenter: Send {
    fn render(&mut self, frame: &Frame);
}

/// 打印到标准输出
#[derive(Debug, Clone)]
pub struct ConsolePresenter {
    timestamps: bool,
}

impl ConsolePresenter {
    pub fn new(timestamps: bool) -> Self {
        Self { timestamps }
    }
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Presenter for ConsolePresenter {
    fn render(&mut self, frame: &Frame) {
        let at = self.timestamps.then(|| Local::now().time());
        println!("{}", format_line(&frame.text(), at));
    }
}

fn format_line(text: &str, at: Option<NaiveTime>) -> String {
    match at {
        Some(time) => format!("[{}] {}", time.format("%H:%M:%S"), text),
        None => text.to_string(),
    }
}
