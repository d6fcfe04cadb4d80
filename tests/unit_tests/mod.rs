mod dual;
mod element;
mod functional;
mod mesh;
mod space;
