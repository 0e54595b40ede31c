use super::super::Model;
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::rc::Rc;
use web_sys::{File, FileList};
use yew::prelude::*;

pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "tiff"];

// Only the last event inside the window is delivered
pub fn debounce<E, F>(duration: u32, callback: F) -> Callback<E>
where
    E: 'static,
    F: Fn(E) + Clone + 'static,
{
    let timeout = Rc::new(RefCell::new(None::<Timeout>));

    Callback::from(move |event: E| {
        let mut timeout_ref = timeout.borrow_mut();

        if let Some(old_timeout) = timeout_ref.take() {
            old_timeout.cancel();
        }

        let inner_callback = callback.clone();
        let new_timeout = Timeout::new(duration, move || {
            inner_callback(event);
        });

        *timeout_ref = Some(new_timeout);
    })
}

pub fn has_accepted_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ACCEPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// First file of the list, if its name carries a supported extension.
pub fn extract_image_file(file_list: &FileList) -> Result<Option<File>, String> {
    match file_list.item(0) {
        None => Ok(None),
        Some(file) if has_accepted_extension(&file.name()) || file.type_() == "image/jpeg" => {
            Ok(Some(file))
        }
        Some(file) => Err(format!(
            "Unsupported file: {}. Use JPG, JPEG, PNG, WEBP or TIFF.",
            file.name()
        )),
    }
}

pub fn render_error_message(model: &Model) -> Html {
    if let Some(error_msg) = &model.error {
        html! {
            <div class="error-message">
                <i class="fa-solid fa-circle-exclamation"></i>
                <p>{ error_msg }</p>
            </div>
        }
    } else {
        html! {}
    }
}

pub fn render_spinner(model: &Model) -> Html {
    if model.loading {
        html! {
            <div class="spinner">
                <i class="fa-solid fa-spinner fa-spin"></i>
                <span>{" Analyzing the image..."}</span>
            </div>
        }
    } else {
        html! {}
    }
}
