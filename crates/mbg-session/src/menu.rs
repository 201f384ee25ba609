//! Fixed menu text

use mbg_core::GatewayConfig;

/// Build the menu reply with the sender's display name interpolated
pub fn build(config: &GatewayConfig, display_name: &str) -> String {
    let p = config.command_prefix;
    format!(
        "* Menu *\n\
         \n  *{bot}*\n\
         ----------------------------\n\
         User: \"{display_name}\"\n\
         Owner: *{owner}*\n\
         \n\
         ----------------------------\n\
         Commands:\n\
         ----------------------------\n\
         \n\
         *General*\n\
         - {p}menu\n\
         - {p}owner\n\
         - {p}qr [text]\n\
         \n\
         *Group*\n\
         - {p}tagall\n\
         - {p}hidetag [text]\n\
         - {p}kick\n\
         - {p}add\n\
         - {p}promote\n\
         - {p}demote\n\
         - {p}kickall\n\
         - {p}close\n\
         - {p}open\n\
         - {p}welcome [off]\n\
         - {p}ghost\n\
         \n\
         *Moderation*\n\
         - {p}nolien [off]\n\
         - {p}nolien2 [off]\n\
         \n\
         *Mode*\n\
         - {p}public\n\
         - {p}private\n\
         \n\
           *{bot}*\n\
         ----------------------------",
        bot = config.bot_name,
        owner = config.owner_name,
    )
}
