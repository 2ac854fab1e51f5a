use iced::widget::{button, center, column, container, opaque, row, stack, text};
use iced::{Alignment, Element, Length};

use crate::photos::authorization::{AlertAction, SettingsAlert};
use crate::Message;

/// Lay `alert` over `base`, blocking input to everything underneath
pub fn modal<'a>(base: Element<'a, Message>, alert: &'a SettingsAlert) -> Element<'a, Message> {
    let actions = alert.actions().into_iter().fold(row![].spacing(10), |buttons, action| {
        let style = match action {
            AlertAction::Cancel => button::secondary,
            AlertAction::OpenSettings => button::primary,
        };
        buttons.push(
            button(text(action.label()))
                .on_press(Message::Alert(action))
                .style(style)
                .padding(10),
        )
    });

    let card = container(
        column![
            text(&alert.title).size(20),
            text(&alert.message).size(14),
            actions,
        ]
        .spacing(16)
        .align_x(Alignment::Center),
    )
    .padding(24)
    .max_width(420.0)
    .style(container::rounded_box);

    stack![
        base,
        opaque(
            center(card)
                .width(Length::Fill)
                .height(Length::Fill)
                .style(|_theme| container::Style {
                    background: Some(iced::Color::from_rgba(0.0, 0.0, 0.0, 0.6).into()),
                    ..container::Style::default()
                })
        ),
    ]
    .into()
}
