//! The static system directive and batch payload format.

/// System directive sent with every classification request.
///
/// The schema it demands is what [`ordersieve_protocol::classify`]
/// validates; the two must stay in sync.
pub const SYSTEM_PROMPT: &str = "\
Ты классификатор сообщений из Telegram-чатов фрилансеров. \
Определи, является ли сообщение заказом на IT-услуги (поиск исполнителя, \
разработчика или подрядчика за деньги).

Ответь строго одним JSON-объектом без пояснений:
{\"is_order\": true|false, \"category\": \"Backend\"|\"Frontend\"|\"Mobile\"|\"AI/ML\"|\"Low-Code\"|\"Other\", \"relevance_score\": 0.0-1.0, \"reason\": \"краткое объяснение\"}

Не считай заказами: продажи, рекламу, спам, поиск работы соискателями, \
обсуждения и вопросы без намерения нанять исполнителя. \
Если сообщение не заказ, ставь is_order=false и category=\"Other\".";

/// Format a batch of texts into one user payload.
///
/// The remote is asked for one JSON object per input, in input order, one
/// per line. Inputs are numbered so a chatty model still keeps order.
pub fn batch_prompt<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let mut payload = String::from(
        "Классифицируй каждое сообщение отдельно. \
Верни ровно по одному JSON-объекту на строку, в порядке сообщений, без нумерации в ответе.\n\n",
    );
    for (i, text) in texts.into_iter().enumerate() {
        payload.push_str(&format!("Сообщение {}:\n{}\n\n", i + 1, text));
    }
    payload
}
