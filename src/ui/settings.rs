use iced::widget::{button, checkbox, column, container, text};
use iced::{Element, Length};

use crate::photos::authorization::AuthorizationStatus;
use crate::Message;

fn describe(status: AuthorizationStatus) -> &'static str {
    match status {
        AuthorizationStatus::NotDetermined => "You have not been asked yet.",
        AuthorizationStatus::Restricted => "The catalog is read-only, so access is restricted.",
        AuthorizationStatus::Denied => "Access is denied.",
        AuthorizationStatus::Authorized => "Full access.",
        AuthorizationStatus::Limited => "Limited access.",
    }
}

pub fn view(status: AuthorizationStatus) -> Element<'static, Message> {
    let mut allow = checkbox("Allow access to the photo library", status.is_authorized());
    if status != AuthorizationStatus::Restricted {
        allow = allow.on_toggle(Message::SetLibraryAccess);
    }

    let content = column![
        text("Library Access").size(32),
        text(describe(status)).size(16),
        allow,
        button("Done").on_press(Message::CloseSettings).padding(10),
    ]
    .spacing(20)
    .padding(40);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
