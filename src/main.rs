#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    yatube::rocket().expect("Failed to configure yatube")
}
