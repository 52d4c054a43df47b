use eframe::egui::{Align2, Color32, FontId, Sense, Widget};

/// smallest font used for the numeral, larger screens scale it up
pub const MIN_FONT_SIZE: f32 = 120.0;

/// One big white number centered in whatever space is left.
pub struct CountdownNumeral {
    value: u32,
}

impl CountdownNumeral {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self { value }
    }
}

impl Widget for CountdownNumeral {
    fn ui(self, ui: &mut eframe::egui::Ui) -> eframe::egui::Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::hover());
        // roughly half the screen height, but never smaller than the classic 120pt
        let size = (rect.height() * 0.5).max(MIN_FONT_SIZE);
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            self.value.to_string(),
            FontId::proportional(size),
            Color32::WHITE,
        );
        response
    }
}
