//! egui 界面实现

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use chrono::Local;
use eframe::egui;
use protocol::ProbeCommand;
use tracing::warn;

use crate::chat::StreamChatClient;
use crate::config::ClientConfig;
use crate::link::{LinkCheckResult, LinkValidationClient, TRANSPORT_FAILURE};
use crate::mailbox::{mailbox, Mailbox};
use crate::probe::DatagramProbeClient;
use crate::runtime::NetworkRuntime;
use crate::tasks::{TaskOutcome, TaskRunner};

/// 每个日志区保留的最大行数
const MAX_LOG_LINES: usize = 1000;
/// 链接检测结果保留条数
const MAX_LINK_RESULTS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Chat,
    Health,
    Links,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Incoming,
    Outgoing,
    Status,
    Error,
}

impl LineKind {
    fn color(self) -> egui::Color32 {
        match self {
            LineKind::Incoming => egui::Color32::from_rgb(220, 220, 230),
            LineKind::Outgoing => egui::Color32::from_rgb(100, 200, 255),
            LineKind::Status => egui::Color32::from_rgb(150, 150, 160),
            LineKind::Error => egui::Color32::from_rgb(255, 100, 100),
        }
    }
}

struct LogLine {
    time: String,
    kind: LineKind,
    text: String,
}

/// 带时间戳的滚动日志
#[derive(Default)]
struct Log {
    lines: VecDeque<LogLine>,
}

impl Log {
    fn push(&mut self, kind: LineKind, text: impl Into<String>) {
        if self.lines.len() >= MAX_LOG_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine {
            time: Local::now().format("%H:%M:%S").to_string(),
            kind,
            text: text.into(),
        });
    }

    fn show(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.lines {
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new(format!("[{}]", line.time))
                                .size(11.0)
                                .color(egui::Color32::from_rgb(100, 100, 110)),
                        );
                        let text = egui::RichText::new(&line.text).color(line.kind.color());
                        if line.kind == LineKind::Status {
                            ui.label(text.italics());
                        } else {
                            ui.label(text);
                        }
                    });
                }
            });
    }
}

/// NetHub 客户端应用
pub struct NetHubApp {
    tab: Tab,

    chat: StreamChatClient,
    /// 聊天回调在 UI 线程执行，直接写入这里
    chat_log: Rc<RefCell<Log>>,
    identity: String,
    input_text: String,
    chat_error: Option<String>,

    probe: DatagramProbeClient,
    probe_server: String,
    probe_log: Log,
    probe_pending: usize,

    link: LinkValidationClient,
    link_url: String,
    link_results: VecDeque<LinkCheckResult>,
    link_pending: usize,

    tasks: TaskRunner,
    outcomes: Mailbox<TaskOutcome>,
    /// 最后析构，保证客户端先于运行时释放
    _runtime: NetworkRuntime,
}

impl NetHubApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ClientConfig) -> anyhow::Result<Self> {
        // 加载中文字体
        setup_fonts(&cc.egui_ctx);

        // 设置深色主题
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let runtime = NetworkRuntime::new()?;

        let chat = StreamChatClient::new(config.chat, runtime.handle());
        let ctx = cc.egui_ctx.clone();
        chat.set_waker(move || ctx.request_repaint());

        let probe_server = config.probe.server_addr.clone();
        let mut probe = DatagramProbeClient::new(config.probe);
        let mut probe_log = Log::default();
        match probe.initialize() {
            Ok(()) => probe_log.push(LineKind::Status, format!("健康检测服务器: {}", probe_server)),
            Err(e) => {
                warn!("Probe client not initialized: {}", e);
                probe_log.push(LineKind::Error, format!("初始化失败: {}", e));
            }
        }

        let link = LinkValidationClient::new(config.link)?;

        let (poster, outcomes) = mailbox();
        let ctx = cc.egui_ctx.clone();
        poster.set_waker(move || ctx.request_repaint());
        let tasks = TaskRunner::new(runtime.handle(), poster);

        Ok(Self {
            tab: Tab::Chat,
            chat,
            chat_log: Rc::new(RefCell::new(Log::default())),
            identity: String::new(),
            input_text: String::new(),
            chat_error: None,
            probe,
            probe_server,
            probe_log,
            probe_pending: 0,
            link,
            link_url: String::new(),
            link_results: VecDeque::new(),
            link_pending: 0,
            tasks,
            outcomes,
            _runtime: runtime,
        })
    }

    fn connect_chat(&mut self) {
        let identity = self.identity.trim().to_string();

        let log = Rc::clone(&self.chat_log);
        let on_message = move |line: String| log.borrow_mut().push(LineKind::Incoming, line);
        let log = Rc::clone(&self.chat_log);
        let on_status = move |status: String| log.borrow_mut().push(LineKind::Status, status);

        match self.chat.connect(&identity, on_message, on_status) {
            Ok(()) => self.chat_error = None,
            Err(e) => {
                warn!("Chat connect failed: {}", e);
                self.chat_error = Some(e.to_string());
            }
        }
    }

    fn send_chat(&mut self) {
        let text = std::mem::take(&mut self.input_text);
        if text.trim().is_empty() {
            return;
        }
        self.chat.send_line(&text);
        // 发送失败时 send_line 已经报告了连接丢失
        if self.chat.is_connected() {
            self.chat_log.borrow_mut().push(LineKind::Outgoing, format!("> {}", text));
        }
    }

    fn submit_probe(&mut self, command: ProbeCommand) {
        self.probe_log.push(LineKind::Outgoing, format!("> {}", command));
        self.probe_pending += 1;
        self.tasks.submit_probe(&self.probe, command.as_str());
    }

    fn submit_link_check(&mut self) {
        let url = self.link_url.trim().to_string();
        if url.is_empty() {
            return;
        }
        self.link_pending += 1;
        self.tasks.submit_link_check(&self.link, url);
    }

    /// 处理后台任务结果，返回处理的条数
    fn poll_outcomes(&mut self) -> usize {
        let mut count = 0;
        while let Some(outcome) = self.outcomes.try_recv() {
            count += 1;
            match outcome {
                TaskOutcome::Probe { command, result } => {
                    self.probe_pending = self.probe_pending.saturating_sub(1);
                    match result {
                        Ok(reply) => self.probe_log.push(LineKind::Incoming, format!("{}: {}", command, reply)),
                        Err(e) => self.probe_log.push(LineKind::Error, format!("{} 失败: {}", command, e)),
                    }
                }
                TaskOutcome::Link(result) => {
                    self.link_pending = self.link_pending.saturating_sub(1);
                    if self.link_results.len() >= MAX_LINK_RESULTS {
                        self.link_results.pop_back();
                    }
                    self.link_results.push_front(result);
                }
            }
        }
        count
    }

    fn chat_tab(&mut self, ui: &mut egui::Ui) {
        let connected = self.chat.is_connected();

        ui.horizontal(|ui| {
            ui.label("身份:");
            let response = ui.add_enabled(
                !connected,
                egui::TextEdit::singleline(&mut self.identity)
                    .desired_width(160.0)
                    .hint_text("用户名"),
            );

            ui.add_space(8.0);

            if connected {
                if ui
                    .add(egui::Button::new("🔌 断开连接").fill(egui::Color32::from_rgb(150, 50, 50)))
                    .clicked()
                {
                    self.chat.disconnect();
                }
            } else {
                let can_connect = !self.identity.trim().is_empty();

                // 按 Enter 连接
                let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let clicked = ui
                    .add_enabled(can_connect, egui::Button::new("🔗 连接").min_size(egui::vec2(70.0, 24.0)))
                    .clicked();
                if can_connect && (enter || clicked) {
                    self.connect_chat();
                }
            }
        });

        if let Some(err) = &self.chat_error {
            ui.add_space(4.0);
            ui.label(egui::RichText::new(format!("⚠ {}", err)).color(egui::Color32::from_rgb(255, 100, 100)));
        }

        ui.separator();

        // 输入行固定在底部
        egui::TopBottomPanel::bottom("chat_input")
            .frame(egui::Frame::new().inner_margin(4.0))
            .show_inside(ui, |ui| {
                ui.add_enabled_ui(self.chat.is_connected(), |ui| {
                    ui.horizontal(|ui| {
                        let response = ui.add(
                            egui::TextEdit::singleline(&mut self.input_text)
                                .hint_text("输入消息，按 Enter 发送...")
                                .desired_width(ui.available_width() - 80.0)
                                .frame(true),
                        );

                        // 按 Enter 发送
                        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            self.send_chat();
                            response.request_focus();
                        }

                        if ui.add(egui::Button::new("发送").min_size(egui::vec2(60.0, 24.0))).clicked() {
                            self.send_chat();
                        }
                    });
                });
            });

        self.chat_log.borrow().show(ui);
    }

    fn health_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("服务器: {}", self.probe_server));
            ui.separator();

            if self.probe.is_active() {
                ui.label(egui::RichText::new("● 就绪").color(egui::Color32::GREEN));
            } else {
                ui.label(egui::RichText::new("● 未初始化").color(egui::Color32::GRAY));
                if ui.button("初始化").clicked() {
                    match self.probe.initialize() {
                        Ok(()) => self.probe_log.push(LineKind::Status, "初始化成功"),
                        Err(e) => self.probe_log.push(LineKind::Error, format!("初始化失败: {}", e)),
                    }
                }
            }
        });

        ui.add_space(4.0);

        ui.horizontal(|ui| {
            let active = self.probe.is_active();
            for command in ProbeCommand::ALL {
                if ui
                    .add_enabled(active, egui::Button::new(command.as_str()).min_size(egui::vec2(70.0, 24.0)))
                    .clicked()
                {
                    self.submit_probe(command);
                }
            }
            if self.probe_pending > 0 {
                ui.spinner();
            }
        });

        ui.separator();
        self.probe_log.show(ui);
    }

    fn links_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("URL:");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.link_url)
                    .hint_text("https://example.com")
                    .desired_width(ui.available_width() - 100.0),
            );

            let can_check = !self.link_url.trim().is_empty();
            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = ui
                .add_enabled(can_check, egui::Button::new("🔍 检测").min_size(egui::vec2(70.0, 24.0)))
                .clicked();
            if can_check && (enter || clicked) {
                self.submit_link_check();
            }

            if self.link_pending > 0 {
                ui.spinner();
            }
        });

        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for result in &self.link_results {
                    ui.horizontal(|ui| {
                        let (mark, color) = if result.is_valid() {
                            ("✓", egui::Color32::GREEN)
                        } else {
                            ("✗", egui::Color32::from_rgb(255, 100, 100))
                        };
                        ui.label(egui::RichText::new(mark).strong().color(color));
                        ui.label(egui::RichText::new(result.url()).color(egui::Color32::from_rgb(220, 220, 230)));

                        let detail = if result.status_code() == TRANSPORT_FAILURE {
                            result.message().to_string()
                        } else {
                            format!("{} {}", result.status_code(), result.message())
                        };
                        ui.label(egui::RichText::new(detail).color(color));
                        ui.label(
                            egui::RichText::new(format!("{} ms", result.response_time_ms()))
                                .size(11.0)
                                .color(egui::Color32::GRAY),
                        );
                    });
                    ui.add_space(2.0);
                }
            });
    }
}

/// 配置中文字体
fn setup_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();

    // 依次尝试 macOS、Linux、Windows 的系统中文字体
    let font_paths = [
        "/System/Library/Fonts/PingFang.ttc",
        "/System/Library/Fonts/STHeiti Light.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
        "C:\\Windows\\Fonts\\msyh.ttc",
    ];

    let Some(font_data) = font_paths.iter().find_map(|path| std::fs::read(path).ok()) else {
        warn!("Failed to load Chinese font, Chinese characters may not display correctly");
        return;
    };

    fonts.font_data.insert(
        "chinese".to_owned(),
        egui::FontData::from_owned(font_data).into(),
    );

    // 将中文字体添加到所有字体族的首位
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .insert(0, "chinese".to_owned());
    }

    ctx.set_fonts(fonts);
}

impl eframe::App for NetHubApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 回调和后台结果都在这里交付，之后才绘制
        let events = self.chat.poll_events() + self.poll_outcomes();
        if events == 0 && self.probe_pending + self.link_pending > 0 {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        // 顶部面板：标签页和连接状态
        egui::TopBottomPanel::top("top_panel")
            .frame(egui::Frame::new().fill(egui::Color32::from_rgb(30, 30, 40)).inner_margin(8.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(egui::RichText::new("🌐 NetHub").color(egui::Color32::WHITE));
                    ui.separator();

                    ui.selectable_value(&mut self.tab, Tab::Chat, "💬 聊天");
                    ui.selectable_value(&mut self.tab, Tab::Health, "❤ 健康检测");
                    ui.selectable_value(&mut self.tab, Tab::Links, "🔗 链接检测");

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if self.chat.is_connected() {
                            ui.label(egui::RichText::new("● 已连接").color(egui::Color32::GREEN));
                        } else {
                            ui.label(egui::RichText::new("● 未连接").color(egui::Color32::GRAY));
                        }
                    });
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(egui::Color32::from_rgb(20, 20, 28)).inner_margin(8.0))
            .show(ctx, |ui| match self.tab {
                Tab::Chat => self.chat_tab(ui),
                Tab::Health => self.health_tab(ui),
                Tab::Links => self.links_tab(ui),
            });
    }
}
