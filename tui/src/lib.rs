//! TUI rendering for termai using ratatui.

mod clipboard;
mod input;
mod theme;

pub use clipboard::SystemClipboard;
pub use input::{InputPump, handle_events};
pub use theme::{Glyphs, Palette, UiOptions, glyphs, palette, spinner_frame, styles};

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Clear, Padding, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use unicode_width::UnicodeWidthStr;

use termai_engine::{App, DisplayItem, Message, NoticeLevel, Phase, Role};

const FOOTER_HINT: &str = "Alt+Enter or Ctrl+Enter to send | Enter for new line | Ctrl+C=quit";
const MAX_INPUT_LINES: u16 = 6;
const MAX_SUGGESTIONS: usize = 8;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App, options: UiOptions) {
    let palette = palette(options);
    let glyphs = glyphs(options);
    let bg_block = Block::default().style(Style::default().bg(palette.bg_dark));
    frame.render_widget(bg_block, frame.area());

    let input_height = input_height(app);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // Header
            Constraint::Min(1),               // Messages
            Constraint::Length(input_height), // Input
            Constraint::Length(1),            // Footer
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0], &palette, &glyphs, options);
    draw_messages(frame, app, chunks[1], &palette, &glyphs, options);
    draw_input(frame, app, chunks[2], &palette, &glyphs);
    draw_footer(frame, chunks[3], &palette);

    if app.suggestions().is_open() {
        draw_suggestions(frame, app, chunks[2], &palette, &glyphs);
    }
}

fn input_height(app: &App) -> u16 {
    let draft_lines = app.draft().text().split('\n').count().max(1) as u16;
    let attachment_line = u16::from(!app.attachments().ephemeral().is_empty());
    draft_lines.min(MAX_INPUT_LINES) + attachment_line + 2
}

fn draw_header(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
    options: UiOptions,
) {
    let sep = Span::styled(
        format!(" {} ", glyphs.separator),
        Style::default().fg(palette.bg_border),
    );
    let profile = app.profile();

    let mut spans = vec![
        Span::styled(
            format!(" {}", profile.name),
            Style::default()
                .fg(palette.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ({})", profile.model),
            Style::default().fg(palette.text_secondary),
        ),
    ];

    if let Some(path) = app.bound_path() {
        spans.push(sep.clone());
        spans.push(Span::styled(
            path.display().to_string(),
            Style::default().fg(palette.text_muted),
        ));
    }

    if let Some(dir) = app.attachments().context_dir() {
        spans.push(sep.clone());
        spans.push(Span::styled(
            format!(
                "{} ({} files)",
                dir.display(),
                app.attachments().context().len()
            ),
            Style::default().fg(palette.accent),
        ));
    }

    let status = match app.phase() {
        Phase::Idle | Phase::Composing => {
            Span::styled("Ready", Style::default().fg(palette.success))
        }
        Phase::Streaming => Span::styled(
            format!(
                "{} Streaming...",
                spinner_frame(app.tick_count(), options)
            ),
            Style::default().fg(palette.warning),
        ),
        Phase::Error => Span::styled(
            "Error",
            Style::default()
                .fg(palette.error)
                .add_modifier(Modifier::BOLD),
        ),
    };
    spans.push(sep);
    spans.push(status);

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.bg_panel));
    frame.render_widget(header, area);
}

fn message_header(message: &Message, palette: &Palette, glyphs: &Glyphs) -> Line<'static> {
    let (icon, style) = match message.role {
        Role::User => (glyphs.user, styles::user_name(palette)),
        Role::Assistant => (glyphs.assistant, styles::assistant_name(palette)),
        Role::System => (
            glyphs.notice,
            Style::default()
                .fg(palette.text_muted)
                .add_modifier(Modifier::BOLD),
        ),
    };
    Line::from(vec![
        Span::styled(format!("{icon} "), style),
        Span::styled(message.role.display_name(), style),
    ])
}

fn push_body(lines: &mut Vec<Line<'static>>, text: &str, style: Style) {
    for line in text.split('\n') {
        lines.push(Line::from(Span::styled(format!("  {line}"), style)));
    }
}

fn build_lines(app: &App, palette: &Palette, glyphs: &Glyphs, options: UiOptions) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    // Only the open assistant message is still receiving text.
    let open_index = app
        .transcript()
        .has_open_message()
        .then(|| app.transcript().len().saturating_sub(1));

    for item in app.display() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        match item {
            DisplayItem::Message { index, thinking } => {
                let Some(message) = app.transcript().get(*index) else {
                    continue;
                };
                lines.push(message_header(message, palette, glyphs));

                let live = open_index == Some(*index);
                let thinking = if live {
                    app.streaming_thinking().unwrap_or_default()
                } else {
                    thinking.as_str()
                };
                if !thinking.is_empty() && app.settings().show_thinking {
                    lines.push(Line::from(Span::styled(
                        format!("  {} thinking", glyphs.thinking),
                        styles::thinking(palette),
                    )));
                    push_body(&mut lines, thinking, styles::thinking(palette));
                }

                if live && message.text.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", spinner_frame(app.tick_count(), options)),
                        Style::default().fg(palette.text_muted),
                    )));
                } else {
                    push_body(
                        &mut lines,
                        &message.text,
                        Style::default().fg(palette.text_primary),
                    );
                }
            }
            DisplayItem::Notice(notice) => {
                let (icon, color) = match notice.level {
                    NoticeLevel::Info => (glyphs.notice, palette.text_secondary),
                    NoticeLevel::Success => (glyphs.notice, palette.success),
                    NoticeLevel::Error => (glyphs.error, palette.error),
                };
                let mut body = notice.text.split('\n');
                let first = body.next().unwrap_or_default();
                lines.push(Line::from(Span::styled(
                    format!("{icon} {first}"),
                    Style::default().fg(color),
                )));
                for line in body {
                    lines.push(Line::from(Span::styled(
                        format!("  {line}"),
                        Style::default().fg(color),
                    )));
                }
            }
        }
    }
    lines
}

fn draw_messages(
    frame: &mut Frame,
    app: &mut App,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
    options: UiOptions,
) {
    let lines = if app.display().is_empty() {
        welcome_lines(palette)
    } else {
        build_lines(app, palette, glyphs, options)
    };

    let block = Block::default().padding(Padding::horizontal(1));
    let inner = block.inner(area);
    let total_lines = wrapped_line_count(&lines, inner.width);
    let max_scroll = total_lines.saturating_sub(inner.height);
    app.clamp_scroll(max_scroll);
    let scroll_offset = max_scroll - app.scroll_back();

    let messages = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset, 0));
    frame.render_widget(messages, area);

    if max_scroll > 0 {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None)
            .style(Style::default().fg(palette.text_muted));
        let mut state = ScrollbarState::new(max_scroll as usize).position(scroll_offset as usize);
        frame.render_stateful_widget(scrollbar, area, &mut state);
    }
}

fn welcome_lines(palette: &Palette) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(
            "termai",
            Style::default()
                .fg(palette.primary)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Type a message, or /help for commands.",
            Style::default().fg(palette.text_muted),
        )),
    ]
}

fn wrapped_line_count(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let mut total: u16 = 0;

    for line in lines {
        let line_width = line.width();
        let rows = if line_width == 0 {
            1
        } else {
            ((line_width - 1) / width) + 1
        };
        total = total.saturating_add(u16::try_from(rows).unwrap_or(u16::MAX));
    }

    total
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect, palette: &Palette, glyphs: &Glyphs) {
    let border_style = match app.phase() {
        Phase::Streaming => Style::default().fg(palette.text_muted),
        Phase::Error => Style::default().fg(palette.error),
        Phase::Idle | Phase::Composing => Style::default().fg(palette.success),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .style(Style::default().bg(palette.bg_panel));
    let inner = block.inner(area);

    let mut lines: Vec<Line> = Vec::new();
    let attached = app.attachments().ephemeral();
    if !attached.is_empty() {
        let names: Vec<&str> = attached.names().collect();
        lines.push(Line::from(Span::styled(
            format!("{} {}", glyphs.bullet, names.join(", ")),
            Style::default().fg(palette.accent),
        )));
    }

    let prompt = format!("You {} ", glyphs.prompt);
    let prompt_width = prompt.width() as u16;
    let draft = app.draft().text();
    let visible = inner.height.saturating_sub(u16::from(!attached.is_empty())).max(1) as usize;

    let before_cursor = &draft[..app.draft().byte_index()];
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col = before_cursor.rsplit('\n').next().unwrap_or_default().width() as u16;
    let first_row = (cursor_row + 1).saturating_sub(visible);

    for (row, text) in draft.split('\n').enumerate().skip(first_row).take(visible) {
        let lead = if row == 0 {
            Span::styled(prompt.clone(), styles::user_name(palette))
        } else {
            Span::raw(" ".repeat(prompt_width as usize))
        };
        lines.push(Line::from(vec![
            lead,
            Span::styled(text.to_string(), Style::default().fg(palette.text_primary)),
        ]));
    }

    let attachment_rows = u16::from(!attached.is_empty());
    let cursor_x = inner
        .x
        .saturating_add(prompt_width)
        .saturating_add(cursor_col)
        .min(inner.right().saturating_sub(1));
    let cursor_y = inner
        .y
        .saturating_add(attachment_rows)
        .saturating_add((cursor_row - first_row) as u16);

    frame.render_widget(Paragraph::new(lines).block(block), area);
    if !app.is_streaming() {
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

fn draw_footer(frame: &mut Frame, area: Rect, palette: &Palette) {
    let footer = Paragraph::new(Line::from(Span::styled(
        format!(" {FOOTER_HINT}"),
        styles::key_hint(palette),
    )));
    frame.render_widget(footer, area);
}

fn draw_suggestions(frame: &mut Frame, app: &App, input_area: Rect, palette: &Palette, glyphs: &Glyphs) {
    let suggestions = app.suggestions();
    let count = suggestions.matches().len().min(MAX_SUGGESTIONS);
    let height = (count as u16).saturating_add(2);
    let width = 40.min(input_area.width);
    let area = Rect {
        x: input_area.x,
        y: input_area.y.saturating_sub(height),
        width,
        height: height.min(input_area.y),
    };
    if area.height < 3 {
        return;
    }

    let specs = termai_engine::command_specs();
    let lines: Vec<Line> = suggestions
        .matches()
        .iter()
        .take(MAX_SUGGESTIONS)
        .enumerate()
        .map(|(i, name)| {
            let description = specs
                .iter()
                .find(|spec| spec.name == *name)
                .map_or("", |spec| spec.description);
            let selected = i == suggestions.selected_index();
            let (marker, style) = if selected {
                (
                    glyphs.selected,
                    styles::key_highlight(palette).bg(palette.bg_highlight),
                )
            } else {
                (" ", Style::default().fg(palette.text_primary))
            };
            Line::from(vec![
                Span::styled(format!("{marker} {name}"), style),
                Span::styled(format!("  {description}"), styles::key_hint(palette)),
            ])
        })
        .collect();

    frame.render_widget(Clear, area);
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(palette.primary))
            .style(Style::default().bg(palette.bg_panel)),
    );
    frame.render_widget(popup, area);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::future::BoxFuture;
    use futures_util::{FutureExt, StreamExt, stream};
    use ratatui::{Terminal, backend::TestBackend};

    use termai_engine::termai_providers::ChunkStream;
    use termai_engine::{
        Chunk, CompletionGateway, CompletionRequest, GatewayError, Profile, SessionSettings,
    };
    use termai_types::{ApiKey, SamplingParams};

    use super::*;

    struct Scripted(Vec<Chunk>);

    impl CompletionGateway for Scripted {
        fn open(
            &self,
            _request: CompletionRequest,
        ) -> BoxFuture<'static, Result<ChunkStream, GatewayError>> {
            let chunks = self.0.clone();
            async move { Ok(stream::iter(chunks).boxed()) }.boxed()
        }
    }

    fn app(chunks: Vec<Chunk>) -> App {
        let profile = Profile {
            name: "work".to_string(),
            provider: "openai".to_string(),
            endpoint: "http://localhost:9/v1".to_string(),
            model: "gpt-test".to_string(),
            api_key: ApiKey::new("k"),
            sampling: SamplingParams::default(),
        };
        App::new(profile, Arc::new(Scripted(chunks)), SessionSettings::default())
    }

    fn render(app: &mut App, options: UiOptions) -> String {
        let backend = TestBackend::new(90, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| draw(frame, app, options)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn empty_session_shows_header_footer_and_prompt() {
        let mut app = app(Vec::new());
        let screen = render(&mut app, UiOptions::default());
        assert!(screen.contains("work"));
        assert!(screen.contains("(gpt-test)"));
        assert!(screen.contains("Ready"));
        assert!(screen.contains("You ▸"));
        assert!(screen.contains(FOOTER_HINT));
    }

    #[tokio::test]
    async fn conversation_and_notices_render() {
        let mut app = app(vec![Chunk::delta("Hi there"), Chunk::end()]);
        app.submit_message("hello");
        while app.pump_stream().await {}
        app.process_command("/frobnicate");

        let screen = render(&mut app, UiOptions::default());
        assert!(screen.contains("hello"));
        assert!(screen.contains("Hi there"));
        assert!(screen.contains("unknown command: /frobnicate"));
        assert!(screen.contains("Error"));
    }

    #[test]
    fn suggestions_popup_lists_matches() {
        let mut app = app(Vec::new());
        for c in "/co".chars() {
            app.insert_char(c);
        }
        let screen = render(&mut app, UiOptions::default());
        assert!(screen.contains("/context-add"));
        assert!(screen.contains("/context-remove"));
    }

    #[test]
    fn ascii_mode_uses_ascii_prompt() {
        let mut app = app(Vec::new());
        let options = UiOptions {
            ascii_only: true,
            high_contrast: true,
        };
        let screen = render(&mut app, options);
        assert!(screen.contains("You >"));
    }

    #[test]
    fn wrapped_line_count_saturates() {
        let long = "x".repeat(usize::from(u16::MAX) + 10);
        let lines = vec![Line::from(long), Line::from("tail")];
        assert_eq!(wrapped_line_count(&lines, 1), u16::MAX);
        assert_eq!(wrapped_line_count(&[Line::from("abcd")], 2), 2);
    }
}
