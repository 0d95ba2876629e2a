mod attention_history;
mod daily_attention;
