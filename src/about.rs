use rocket_dyn_templates::Template;
use serde::Serialize;

use crate::users::models::User;

#[derive(Serialize)]
struct StaticContext<'a> {
    user: Option<&'a User>,
}

#[get("/author")]
pub fn author(current_user: Option<User>) -> Template {
    Template::render(
        "about/author",
        StaticContext {
            user: current_user.as_ref(),
        },
    )
}

#[get("/tech")]
pub fn tech(current_user: Option<User>) -> Template {
    Template::render(
        "about/tech",
        StaticContext {
            user: current_user.as_ref(),
        },
    )
}
