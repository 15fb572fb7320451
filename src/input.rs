//! Keyboard and pointer events mapped to game actions.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Flap,
    Up,
    Down,
    Select,
    Back,
    Type(char),
    Erase,
    Quit,
}

/// Translates one terminal event. `typing` is true while the player is entering
/// their name, where letters are text rather than commands.
pub fn translate(event: &Event, typing: bool) -> Option<Action> {
    match event {
        Event::Key(key) => translate_key(key, typing),
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            ..
        }) => Some(Action::Flap),
        _ => None,
    }
}

fn translate_key(key: &KeyEvent, typing: bool) -> Option<Action> {
    // Key repeat would turn a held space bar into a rocket.
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    match key.code {
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Enter => Some(Action::Select),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Backspace if typing => Some(Action::Erase),
        KeyCode::Char(c) if typing => Some(Action::Type(c)),
        KeyCode::Char(' ') => Some(Action::Flap),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('m') => Some(Action::Back),
        KeyCode::Char('k') => Some(Action::Up),
        KeyCode::Char('j') => Some(Action::Down),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn space_and_click_flap() {
        assert_eq!(translate(&press(KeyCode::Char(' ')), false), Some(Action::Flap));
        let click = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(translate(&click, false), Some(Action::Flap));
    }

    #[test]
    fn letters_are_text_while_typing() {
        assert_eq!(translate(&press(KeyCode::Char('q')), true), Some(Action::Type('q')));
        assert_eq!(translate(&press(KeyCode::Char('q')), false), Some(Action::Quit));
        assert_eq!(translate(&press(KeyCode::Backspace), true), Some(Action::Erase));
        assert_eq!(translate(&press(KeyCode::Esc), true), Some(Action::Back));
    }

    #[test]
    fn releases_are_ignored() {
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char(' '),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(translate(&release, false), None);
    }

    #[test]
    fn ctrl_c_always_quits() {
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(translate(&ctrl_c, true), Some(Action::Quit));
    }
}
